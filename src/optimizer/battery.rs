/// Battery energy storage used by the hourly dispatch model.
///
/// Maintains its state of charge (SOC) and enforces power, energy, and
/// efficiency constraints when given a power setpoint.
///
/// # Power Convention
/// - Positive setpoint/return: charging (absorbs surplus generation)
/// - Negative setpoint/return: discharging (serves facility load)
#[derive(Debug, Clone)]
pub struct Battery {
    /// Battery capacity in kilowatt-hours.
    pub capacity_kwh: f64,

    /// State of charge as a fraction (0.0 to 1.0).
    pub soc: f64,

    /// Maximum charge power in kilowatts.
    pub max_charge_kw: f64,

    /// Maximum discharge power in kilowatts.
    pub max_discharge_kw: f64,

    /// Charging efficiency (0..1.0).
    pub eta_c: f64,

    /// Discharging efficiency (0..1.0).
    pub eta_d: f64,
}

impl Battery {
    /// Creates a battery whose power rating follows from its energy-to-power ratio.
    ///
    /// # Arguments
    ///
    /// * `capacity_kwh` - Energy capacity in kWh (zero disables the battery)
    /// * `soc` - Initial state of charge, clamped to 0.0..=1.0
    /// * `duration_hours` - Hours to fully charge or discharge at rated power
    /// * `eta_c` - Charging efficiency (0..1.0)
    /// * `eta_d` - Discharging efficiency (0..1.0)
    pub fn with_duration(
        capacity_kwh: f64,
        soc: f64,
        duration_hours: f64,
        eta_c: f64,
        eta_d: f64,
    ) -> Self {
        let capacity_kwh = capacity_kwh.max(0.0);
        let rated_kw = if duration_hours > 0.0 {
            capacity_kwh / duration_hours
        } else {
            0.0
        };
        Self {
            capacity_kwh,
            soc: soc.clamp(0.0, 1.0),
            max_charge_kw: rated_kw,
            max_discharge_kw: rated_kw,
            eta_c: eta_c.clamp(f64::EPSILON, 1.0),
            eta_d: eta_d.clamp(f64::EPSILON, 1.0),
        }
    }

    /// Stored energy in kWh.
    pub fn stored_kwh(&self) -> f64 {
        self.soc * self.capacity_kwh
    }

    /// Applies a setpoint for one step and returns the power actually exchanged.
    ///
    /// Enforces charge/discharge power limits, SOC bounds, and efficiency losses.
    pub fn dispatch_kw(&mut self, setpoint_kw: f64, dt_hours: f64) -> f64 {
        if self.capacity_kwh <= 0.0 || dt_hours <= 0.0 {
            return 0.0;
        }

        let cmd_kw = if setpoint_kw >= 0.0 {
            setpoint_kw.min(self.max_charge_kw)
        } else {
            setpoint_kw.max(-self.max_discharge_kw)
        };

        if cmd_kw > 0.0 {
            let max_kwh_this_step = (1.0 - self.soc) * self.capacity_kwh / self.eta_c;
            let actual_kw = cmd_kw.min((max_kwh_this_step / dt_hours).max(0.0));

            self.soc += (actual_kw * dt_hours * self.eta_c) / self.capacity_kwh;
            self.soc = self.soc.clamp(0.0, 1.0);

            actual_kw
        } else if cmd_kw < 0.0 {
            let max_kwh_this_step = self.soc * self.capacity_kwh * self.eta_d;
            let actual_abs_kw = (-cmd_kw).min((max_kwh_this_step / dt_hours).max(0.0));

            self.soc -= (actual_abs_kw * dt_hours) / (self.capacity_kwh * self.eta_d);
            self.soc = self.soc.clamp(0.0, 1.0);

            -actual_abs_kw
        } else {
            0.0
        }
    }
}
