//! Cart route handlers.
//!
//! The cart page is server-rendered; mutations are small form posts answered
//! with JSON so `static/js/cart.js` can update totals in place.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use threadline_core::VariantId;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::services::cart::{self, Cart, PricedCart, PricedLine};
use crate::state::AppState;

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartLineView {
    pub variant_id: i32,
    pub product_slug: String,
    pub title: String,
    pub size: String,
    pub qty: u32,
    pub unit_price: String,
    pub line_total: String,
    pub image_url: Option<String>,
}

impl From<&PricedLine> for CartLineView {
    fn from(line: &PricedLine) -> Self {
        Self {
            variant_id: line.variant.variant_id.as_i32(),
            product_slug: line.variant.product_slug.clone(),
            title: line.variant.product_title.clone(),
            size: line.variant.size_name.clone(),
            qty: line.qty,
            unit_price: line.unit_price.display(),
            line_total: line.line_total.display(),
            image_url: line.variant.image_url.clone(),
        }
    }
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub total: String,
    pub item_count: u64,
}

impl From<&PricedCart> for CartView {
    fn from(priced: &PricedCart) -> Self {
        Self {
            lines: priced.lines.iter().map(CartLineView::from).collect(),
            total: priced.total.display(),
            item_count: priced.item_count(),
        }
    }
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub cart: CartView,
}

/// Cart mutation form. Fields are read as text so malformed input becomes a
/// 400 with a JSON body instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct CartForm {
    pub variant_id: Option<String>,
    pub qty: Option<String>,
}

impl CartForm {
    fn variant_id(&self) -> Result<VariantId> {
        let raw = self
            .variant_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::BadRequest("no variant id".to_string()))?;
        raw.parse()
            .map_err(|_| AppError::BadRequest(format!("invalid variant id '{raw}'")))
    }

    /// Requested quantity; a missing value means one.
    fn qty(&self) -> Result<i64> {
        match self.qty.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(1),
            Some(raw) => raw
                .parse()
                .map_err(|_| AppError::BadRequest(format!("invalid quantity '{raw}'"))),
        }
    }
}

/// JSON body returned by every cart mutation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartResponse {
    pub success: bool,
    /// Live cart total as a plain decimal, e.g. `"37.00"`.
    pub cart_total: String,
    pub item_count: u64,
}

/// JSON body for `GET /cart/count`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartCountResponse {
    pub count: u64,
}

/// Error wrapper that answers client errors as `{"success": false, "error": ...}`.
pub struct JsonError(AppError);

impl<E: Into<AppError>> From<E> for JsonError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for JsonError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            return self.0.into_response();
        }
        (
            status,
            Json(serde_json::json!({ "success": false, "error": self.0.to_string() })),
        )
            .into_response()
    }
}

async fn respond(state: &AppState, cart: &Cart) -> std::result::Result<Json<CartResponse>, JsonError> {
    let priced = cart.price(&state.catalog(), state.config().currency).await?;
    Ok(Json(CartResponse {
        success: true,
        cart_total: format!("{:.2}", priced.total.amount),
        item_count: priced.item_count(),
    }))
}

/// Display cart page.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<CartShowTemplate> {
    let cart = cart::load(&session).await?;
    let priced = cart.price(&state.catalog(), state.config().currency).await?;

    Ok(CartShowTemplate {
        cart: CartView::from(&priced),
    })
}

/// Add a variant to the cart.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CartForm>,
) -> std::result::Result<Json<CartResponse>, JsonError> {
    let variant_id = form.variant_id()?;
    let qty = form.qty()?;

    let mut cart = cart::load(&session).await?;
    cart.add_checked(&state.catalog(), variant_id, qty).await?;
    cart::save(&session, &cart).await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        &[("variant_id", variant_id.to_string()), ("qty", qty.to_string())],
    );

    respond(&state, &cart).await
}

/// Set the quantity of a cart entry. Zero or less removes it.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CartForm>,
) -> std::result::Result<Json<CartResponse>, JsonError> {
    let variant_id = form.variant_id()?;
    let qty = form.qty()?;

    let mut cart = cart::load(&session).await?;
    cart.update(variant_id, qty)?;
    cart::save(&session, &cart).await?;

    respond(&state, &cart).await
}

/// Remove a cart entry.
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CartForm>,
) -> std::result::Result<Json<CartResponse>, JsonError> {
    let variant_id = form.variant_id()?;

    let mut cart = cart::load(&session).await?;
    cart.remove(variant_id);
    cart::save(&session, &cart).await?;

    respond(&state, &cart).await
}

/// Number of units in the cart, for the header badge.
#[instrument(skip(session))]
pub async fn count(session: Session) -> std::result::Result<Json<CartCountResponse>, JsonError> {
    let cart = cart::load(&session).await?;
    Ok(Json(CartCountResponse {
        count: cart.item_count(),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use http_body_util::BodyExt;

    use super::*;

    fn form(variant_id: Option<&str>, qty: Option<&str>) -> CartForm {
        CartForm {
            variant_id: variant_id.map(String::from),
            qty: qty.map(String::from),
        }
    }

    #[test]
    fn test_form_parsing() {
        let f = form(Some(" 12 "), None);
        assert_eq!(f.variant_id().unwrap(), VariantId::new(12));
        assert_eq!(f.qty().unwrap(), 1);

        assert_eq!(form(Some("3"), Some("-2")).qty().unwrap(), -2);
    }

    #[test]
    fn test_form_rejects_garbage() {
        assert!(matches!(form(None, None).variant_id(), Err(AppError::BadRequest(_))));
        assert!(matches!(form(Some("abc"), None).variant_id(), Err(AppError::BadRequest(_))));
        assert!(matches!(form(Some("1"), Some("two")).qty(), Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_json_error_body() {
        let response = JsonError::from(AppError::BadRequest("no variant id".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Bad request: no variant id");
    }
}
