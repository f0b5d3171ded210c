pub mod ev;
pub mod payoff;
