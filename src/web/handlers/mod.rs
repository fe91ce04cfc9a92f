pub mod health;
pub mod hik;
