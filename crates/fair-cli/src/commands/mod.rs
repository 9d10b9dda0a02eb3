pub mod check;
pub mod sort;
