//! Pure domain modules: chain container, validation rules, transaction pool.

pub mod chain;
pub mod pool;
pub mod validation;
