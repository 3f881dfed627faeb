pub mod order;

pub use order::{Order, OrderLine, OrderStatus, OrderView, OrderLineView};
