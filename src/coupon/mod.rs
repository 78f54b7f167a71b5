//! Coupon quota and grant lifecycle.
//!
//! A coupon is a fixed-capacity pool: `total_quantity` grants, first come
//! first served, at most one per user, inside a validity window.

pub mod db;
pub mod models;
pub mod repository;
pub mod service;

pub use db::PgCouponStore;
pub use models::{CouponQuota, GrantStatus, UserGrant};
pub use repository::{CouponStore, MemoryCouponStore};
pub use service::CouponService;
