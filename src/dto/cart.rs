use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::CartItem;

/// Everything is optional so a missing field is reported as a 400 by the
/// handler rather than as a deserialisation failure.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RemoveFromCartQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CartList {
    #[schema(value_type = Vec<CartItem>)]
    pub items: Vec<CartItem>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestSession {
    pub guest_session_id: Option<String>,
    pub created: bool,
}
