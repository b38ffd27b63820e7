pub(crate) mod positions;
pub(crate) mod risk_state;
