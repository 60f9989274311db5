pub mod flights;
pub mod insurance;
pub mod membership;
pub mod oracles;
pub mod state;
