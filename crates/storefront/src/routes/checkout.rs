//! Checkout route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::routes::cart::CartView;
use crate::services::cart;
use crate::services::checkout::{self, CheckoutError, CheckoutForm, CheckoutOutcome, FieldError};
use crate::state::AppState;

/// Checkout form page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/form.html")]
pub struct CheckoutFormTemplate {
    pub cart: CartView,
    pub form: CheckoutForm,
    pub errors: Vec<FieldError>,
}

impl CheckoutFormTemplate {
    /// First error message for a field.
    #[must_use]
    pub fn error_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// Submitted value of a field, or empty.
    #[must_use]
    pub fn value(&self, field: &str) -> &str {
        let value = match field {
            "name" => self.form.name.as_deref(),
            "email" => self.form.email.as_deref(),
            "mobile" => self.form.mobile.as_deref(),
            "address" => self.form.address.as_deref(),
            "payment_method" => self.form.payment_method.as_deref(),
            _ => None,
        };
        value.unwrap_or_default()
    }

    /// Whether the card option should be preselected.
    #[must_use]
    pub fn card_selected(&self) -> bool {
        self.value("payment_method").eq_ignore_ascii_case("card")
    }
}

/// Card payment page: Stripe.js confirms the intent in the browser.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/payment.html")]
pub struct CheckoutPaymentTemplate {
    pub order_id: i32,
    pub total: String,
    pub client_secret: String,
    pub publishable_key: String,
    pub return_url: String,
}

/// Order confirmation page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/success.html")]
pub struct CheckoutSuccessTemplate {
    pub order_id: Option<i32>,
    pub total: Option<String>,
    pub cash_on_delivery: bool,
}

/// Payment cancelled page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/cancel.html")]
pub struct CheckoutCancelTemplate;

/// Display the checkout form with the cart summary.
#[instrument(skip(state, session))]
pub async fn form(State(state): State<AppState>, session: Session) -> Result<CheckoutFormTemplate> {
    let cart = cart::load(&session).await?;
    let priced = cart.price(&state.catalog(), state.config().currency).await?;

    Ok(CheckoutFormTemplate {
        cart: CartView::from(&priced),
        form: CheckoutForm::default(),
        errors: Vec::new(),
    })
}

/// Re-render the form with errors and a 422 status.
async fn invalid(
    state: &AppState,
    session: &Session,
    form: CheckoutForm,
    errors: Vec<FieldError>,
) -> Result<Response> {
    let cart = cart::load(session).await?;
    let priced = cart.price(&state.catalog(), state.config().currency).await?;

    let template = CheckoutFormTemplate {
        cart: CartView::from(&priced),
        form,
        errors,
    };
    Ok((StatusCode::UNPROCESSABLE_ENTITY, template).into_response())
}

/// Place the order.
#[instrument(skip(state, session, form))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    let new_order = match checkout::validate(&form) {
        Ok(order) => order,
        Err(errors) => {
            tracing::debug!(fields = ?errors.iter().map(|e| e.field).collect::<Vec<_>>(), "Checkout form invalid");
            return invalid(&state, &session, form, errors).await;
        }
    };

    let mut cart = cart::load(&session).await?;
    let config = state.config();
    let catalog = state.catalog();
    let orders = state.orders();

    let result = checkout::place_order(
        &catalog,
        &orders,
        state.stripe(),
        &mut cart,
        new_order,
        config.currency,
    )
    .await;

    match result {
        Ok(outcome) => {
            cart::save(&session, &cart).await?;
            add_breadcrumb(
                "checkout",
                "Order placed",
                &[("order_id", outcome.order().id.to_string())],
            );
            Ok(render_outcome(&state, outcome))
        }
        Err(CheckoutError::EmptyCart) => {
            let errors = vec![FieldError {
                field: "cart",
                message: "Your cart is empty.".to_string(),
            }];
            invalid(&state, &session, form, errors).await
        }
        Err(CheckoutError::Repository(e)) => Err(AppError::Database(e)),
        Err(CheckoutError::Payment { order, source }) => {
            cart::save(&session, &cart).await?;
            tracing::warn!(order_id = %order.id, error = %source, "Card payment could not be opened");
            Err(AppError::Payment(source))
        }
        Err(CheckoutError::IntentNotRecorded { order, source }) => {
            cart::save(&session, &cart).await?;
            tracing::warn!(order_id = %order.id, "Payment intent not recorded");
            Err(AppError::Database(source))
        }
    }
}

fn render_outcome(state: &AppState, outcome: CheckoutOutcome) -> Response {
    match outcome {
        CheckoutOutcome::CashOnDelivery { order, total } => CheckoutSuccessTemplate {
            order_id: Some(order.id.as_i32()),
            total: Some(total.display()),
            cash_on_delivery: true,
        }
        .into_response(),
        CheckoutOutcome::Card {
            order,
            intent,
            total,
        } => CheckoutPaymentTemplate {
            order_id: order.id.as_i32(),
            total: total.display(),
            client_secret: intent.client_secret,
            publishable_key: state.config().stripe.publishable_key.clone(),
            return_url: state.config().absolute_url("/checkout/success"),
        }
        .into_response(),
    }
}

/// Landing page after payment (Stripe redirects here).
pub async fn success() -> CheckoutSuccessTemplate {
    CheckoutSuccessTemplate {
        order_id: None,
        total: None,
        cash_on_delivery: false,
    }
}

/// Landing page when the shopper abandons payment.
pub async fn cancel() -> CheckoutCancelTemplate {
    CheckoutCancelTemplate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(form: CheckoutForm, errors: Vec<FieldError>) -> CheckoutFormTemplate {
        CheckoutFormTemplate {
            cart: CartView {
                lines: Vec::new(),
                total: "$0.00".to_string(),
                item_count: 0,
            },
            form,
            errors,
        }
    }

    #[test]
    fn test_error_and_value_lookup() {
        let form = CheckoutForm {
            name: Some("Asha".to_string()),
            payment_method: Some("card".to_string()),
            ..CheckoutForm::default()
        };
        let t = template(
            form,
            vec![FieldError {
                field: "mobile",
                message: "Mobile number is required.".to_string(),
            }],
        );

        assert_eq!(t.value("name"), "Asha");
        assert_eq!(t.value("address"), "");
        assert_eq!(t.error_for("mobile"), Some("Mobile number is required."));
        assert_eq!(t.error_for("name"), None);
        assert!(t.card_selected());
    }

    #[test]
    fn test_form_renders_errors_and_values() {
        let form = CheckoutForm {
            name: Some("Asha <b>".to_string()),
            ..CheckoutForm::default()
        };
        let html = template(
            form,
            vec![FieldError {
                field: "cart",
                message: "Your cart is empty.".to_string(),
            }],
        )
        .render()
        .unwrap_or_default();

        assert!(html.contains("Your cart is empty."));
        assert!(html.contains("Asha &#60;b&#62;") || html.contains("Asha &lt;b&gt;"));
    }
}
