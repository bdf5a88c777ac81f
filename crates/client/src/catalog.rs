//! Read-only restaurant and menu catalog.
//!
//! Restaurants and menus change rarely, so responses are cached in memory
//! with `moka` (5-minute TTL by default). Search results are not cached.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use food_client_core::RestaurantId;

use crate::api::{ApiClient, ApiError, RequestSpec, wire};
use crate::models::{FoodItem, Restaurant};

/// Default time a catalog response stays cached.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Restaurants,
    Restaurant(RestaurantId),
    Menu(RestaurantId),
}

#[derive(Debug, Clone)]
enum CacheValue {
    Restaurants(Arc<Vec<Restaurant>>),
    Restaurant(Box<Restaurant>),
    Menu(Arc<Vec<FoodItem>>),
}

/// Client for the restaurant and food endpoints.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    api: ApiClient,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogClient {
    /// Create a catalog client whose responses live for `ttl`.
    #[must_use]
    pub fn new(api: ApiClient, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(ttl)
            .build();

        Self {
            inner: Arc::new(CatalogClientInner { api, cache }),
        }
    }

    /// All restaurants.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn restaurants(&self) -> Result<Vec<Restaurant>, ApiError> {
        if let Some(CacheValue::Restaurants(list)) =
            self.inner.cache.get(&CacheKey::Restaurants).await
        {
            debug!("Cache hit for restaurants");
            return Ok(list.as_ref().clone());
        }

        let body = self.inner.api.execute(RequestSpec::get("/restaurant")).await?;
        let list = wire::parse_restaurants(&body);

        self.inner
            .cache
            .insert(
                CacheKey::Restaurants,
                CacheValue::Restaurants(Arc::new(list.clone())),
            )
            .await;
        Ok(list)
    }

    /// One restaurant.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the restaurant cannot be
    /// read.
    #[instrument(skip(self))]
    pub async fn restaurant(&self, id: RestaurantId) -> Result<Restaurant, ApiError> {
        let key = CacheKey::Restaurant(id);
        if let Some(CacheValue::Restaurant(restaurant)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for restaurant");
            return Ok(*restaurant);
        }

        let body = self
            .inner
            .api
            .execute(RequestSpec::get(format!("/restaurant/{id}")))
            .await?;
        let restaurant = wire::parse_restaurant(&body)?;

        self.inner
            .cache
            .insert(key, CacheValue::Restaurant(Box::new(restaurant.clone())))
            .await;
        Ok(restaurant)
    }

    /// The menu of one restaurant.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn menu(&self, restaurant_id: RestaurantId) -> Result<Vec<FoodItem>, ApiError> {
        let key = CacheKey::Menu(restaurant_id);
        if let Some(CacheValue::Menu(items)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for menu");
            return Ok(items.as_ref().clone());
        }

        let body = self
            .inner
            .api
            .execute(RequestSpec::get(format!("/foods/restaurants/{restaurant_id}")))
            .await?;
        let mut items = wire::parse_foods(&body);
        for item in &mut items {
            item.restaurant_id.get_or_insert(restaurant_id);
        }

        self.inner
            .cache
            .insert(key, CacheValue::Menu(Arc::new(items.clone())))
            .await;
        Ok(items)
    }

    /// Food items whose name matches `name`.
    ///
    /// A blank query returns no results without a request.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn search_foods(&self, name: &str) -> Result<Vec<FoodItem>, ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Vec::new());
        }

        let spec = RequestSpec::get("/foods/restaurants/search").query("name", name);
        let body = self.inner.api.execute(spec).await?;
        Ok(wire::parse_foods(&body))
    }

    /// Drop every cached response.
    pub async fn invalidate(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}
