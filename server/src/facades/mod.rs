//! Facade register and content pushes.

pub mod crud;
