//! Storefront catalog reads and cart write-through relays.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use super::assemble::absorb;
use super::normalize::escape_html;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::merch::{
    AddToCartRequest, CartItem, CheckoutLink, Collection, CollectionList, Product, ProductList,
};
use crate::upstream::{endpoint, UpstreamClient, UpstreamRequest};

const SERVICE: &str = "fourthwall";

#[derive(Debug, Deserialize)]
struct ResultPage<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CartItems {
    #[serde(default)]
    pub items: Vec<CartItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartLinkFields {
    #[serde(default)]
    checkout_url: Option<String>,
}

/// Upstream cart response, relayed as-is.
#[derive(Debug)]
pub struct CartRelay {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Clone)]
pub struct StorefrontAggregator {
    config: Arc<Config>,
    upstream: UpstreamClient,
}

impl StorefrontAggregator {
    pub fn new(config: Arc<Config>, upstream: UpstreamClient) -> Self {
        Self { config, upstream }
    }

    fn url(&self, path: &str) -> Result<Url, AppError> {
        let storefront = &self.config.storefront;
        endpoint(&storefront.api_url, path, &[("storefront_token", storefront.token()?)])
    }

    /// All products, or the products of one collection.
    pub async fn products(&self, collection: Option<&str>) -> Result<ProductList, AppError> {
        let path = match collection {
            Some(slug) => format!("collections/{}/products", path_segment("collection", slug)?),
            None => "products".to_string(),
        };
        let page: ResultPage<Product> = self
            .upstream
            .fetch_json(UpstreamRequest::get(SERVICE, self.url(&path)?))
            .await?;

        let products: Vec<Product> = page
            .results
            .into_iter()
            .filter(Product::is_public)
            .map(sanitize)
            .collect();
        tracing::debug!(count = products.len(), collection = ?collection, "products fetched");
        Ok(ProductList { products })
    }

    /// Configured collections with their products. Each collection that
    /// fails comes back with an empty product list.
    pub async fn collections(&self) -> Result<CollectionList, AppError> {
        let configured = &self.config.storefront.collections;
        let results = join_all(configured.iter().map(|c| self.products(Some(c.id.as_str())))).await;

        let mut collections = Vec::with_capacity(configured.len());
        for (collection, result) in configured.iter().zip(results) {
            let list = absorb("collection", result)?;
            collections.push(Collection {
                id: collection.id.clone(),
                name: collection.name.clone(),
                products: list.products,
            });
        }
        Ok(CollectionList { collections })
    }

    /// A single publicly visible product.
    pub async fn product(&self, slug: &str) -> Result<Product, AppError> {
        let path = format!("products/{}", path_segment("product", slug)?);
        let product: Product = match self
            .upstream
            .fetch_json(UpstreamRequest::get(SERVICE, self.url(&path)?))
            .await
        {
            Ok(product) => product,
            Err(AppError::NotFound(_)) => return Err(product_not_found(slug)),
            Err(e) => return Err(e),
        };

        if !product.is_public() {
            tracing::debug!(slug, "product is not public");
            return Err(product_not_found(slug));
        }
        Ok(sanitize(product))
    }

    pub async fn create_cart(&self, items: &CartItems) -> Result<CartRelay, AppError> {
        let req = UpstreamRequest::post(SERVICE, self.url("carts")?).json(items)?;
        self.relay(req).await
    }

    pub async fn add_to_cart(&self, cart_id: &str, item: &AddToCartRequest) -> Result<CartRelay, AppError> {
        if item.quantity == 0 {
            return Err(AppError::BadRequest("quantity must be at least 1".into()));
        }
        let path = format!("carts/{}/add", path_segment("cart", cart_id)?);
        let body = CartItems {
            items: vec![CartItem {
                variant_id: item.variant_id.clone(),
                quantity: item.quantity,
            }],
        };
        let req = UpstreamRequest::post(SERVICE, self.url(&path)?).json(&body)?;
        self.relay(req).await
    }

    pub async fn cart(&self, cart_id: &str) -> Result<CartRelay, AppError> {
        let path = format!("carts/{}", path_segment("cart", cart_id)?);
        self.relay(UpstreamRequest::get(SERVICE, self.url(&path)?)).await
    }

    /// Hosted checkout page for a cart.
    ///
    /// Built from the configured checkout domain; without one, the cart's own
    /// `checkoutUrl` is used.
    pub async fn checkout_link(&self, cart_id: &str) -> Result<CheckoutLink, AppError> {
        let cart_id = path_segment("cart", cart_id)?;
        let storefront = &self.config.storefront;

        let checkout_url = match storefront.checkout_domain.as_deref() {
            Some(domain) => hosted_checkout_url(domain, &storefront.currency, cart_id)?,
            None => {
                let path = format!("carts/{}", cart_id);
                let cart: CartLinkFields = self
                    .upstream
                    .fetch_json(UpstreamRequest::get(SERVICE, self.url(&path)?))
                    .await?;
                cart.checkout_url.filter(|u| !u.is_empty()).ok_or_else(|| {
                    AppError::Configuration(
                        "no checkout domain configured and cart carries no checkout URL".into(),
                    )
                })?
            }
        };

        Ok(CheckoutLink {
            cart_id: cart_id.to_string(),
            checkout_url,
        })
    }

    /// Any status except 429 is passed through with its body.
    async fn relay(&self, req: UpstreamRequest) -> Result<CartRelay, AppError> {
        let path = req.path().to_string();
        let resp = self.upstream.send(req).await?;
        if resp.status == StatusCode::TOO_MANY_REQUESTS {
            resp.check(SERVICE, &path)?;
        }
        if !resp.status.is_success() {
            tracing::warn!(path = %path, status = %resp.status, "cart relay returned non-success");
        }
        Ok(CartRelay {
            status: resp.status,
            body: resp.body,
        })
    }
}

/// Checkout page URL on the storefront's own domain.
pub fn hosted_checkout_url(domain: &str, currency: &str, cart_id: &str) -> Result<String, AppError> {
    let host = domain
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    let url = endpoint(
        &format!("https://{}", host),
        "checkout/",
        &[("cartCurrency", currency), ("cartId", cart_id)],
    )?;
    Ok(url.to_string())
}

/// Identifiers are interpolated into upstream paths, so only plain slugs pass.
fn path_segment<'a>(what: &str, value: &'a str) -> Result<&'a str, AppError> {
    let value = value.trim();
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(value)
    } else {
        Err(AppError::BadRequest(format!("invalid {} identifier", what)))
    }
}

fn product_not_found(slug: &str) -> AppError {
    AppError::NotFound(format!("product '{}' not found", slug))
}

fn sanitize(mut product: Product) -> Product {
    product.name = escape_html(&product.name);
    product.description = escape_html(&product.description);
    for variant in &mut product.variants {
        variant.name = escape_html(&variant.name);
        variant.attributes.description = escape_html(&variant.attributes.description);
    }
    product
}
