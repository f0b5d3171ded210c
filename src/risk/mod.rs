pub mod limits;
pub mod margin;
pub mod stress;
