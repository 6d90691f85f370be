//! Pump — identity, rated flow, efficiency, power and price. Immutable after
//! load.

use serde::{Deserialize, Serialize};

use super::ids::PumpId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pump {
    pub id: PumpId,
    /// Rated flow, m^3/h.
    pub q_rated_m3ph: f64,
    /// Efficiency, 0..1.
    pub efficiency: f64,
    pub power_kw: f64,
    /// Price per kWh.
    pub electricity_price: f64,
}

impl Pump {
    /// Effective delivered flow at this pump's rated efficiency.
    pub fn effective_flow(&self) -> f64 {
        self.q_rated_m3ph * self.efficiency
    }
}
