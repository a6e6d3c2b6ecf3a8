//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod address;
pub mod user;
pub mod coupon;

pub use product::{NewProduct, Product, ProductError, Rating};
pub use order::{LineItem, Order, OrderError, OrderOwner, OrderRecord, OrderStatus, OrderTotals};
pub use cart::{Cart, CartError, CartLine, CartOwner, Wishlist, WishlistLine};
pub use address::{Address, OwnedAddress};
pub use user::{Role, User, UserProfile, UserSettings};
pub use coupon::{Coupon, CouponError, Discount};
