//! Coupon lookup.

use axum::{
    Json,
    extract::{Path, State},
};

use colando_core::coupon::{Coupon, CouponCode};

use crate::db::CouponRepository;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// `GET /api/coupons/{code}`
///
/// Returns the stored record whether or not it is currently usable; the
/// client decides validity against its own clock.
#[tracing::instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(code): Path<String>) -> Result<Json<Coupon>> {
    let code = CouponCode::parse(&code)?;
    CouponRepository::new(state.pool())
        .get_by_code(&code)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Coupon".to_string()))
}
