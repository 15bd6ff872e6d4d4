pub mod turn;

pub use turn::{NewTurn, Role, Turn};
