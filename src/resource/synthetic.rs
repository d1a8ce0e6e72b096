//! Deterministic synthetic weather for sites without usable external data.
//!
//! The generator is a pure function of `(coordinates, date range)`: the RNG
//! seed is derived from those inputs alone, so the same request always
//! synthesizes the same series.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, StandardNormal};

use super::series::HourlyResource;
use crate::request::{Coordinates, DateRange};

/// AR(1) state that reverts towards `mean` with persistence `alpha`.
#[derive(Debug, Clone)]
struct Ar1 {
    mean: f64,
    alpha: f64,
    noise_std: f64,
    min: f64,
    max: f64,
    value: f64,
}

impl Ar1 {
    fn new(mean: f64, alpha: f64, noise_std: f64, min: f64, max: f64) -> Self {
        Self {
            mean,
            alpha,
            noise_std,
            min,
            max,
            value: mean,
        }
    }

    fn step(&mut self, rng: &mut StdRng) -> f64 {
        let eps: f64 = StandardNormal.sample(rng);
        self.value = self.mean + self.alpha * (self.value - self.mean) + self.noise_std * eps;
        self.value = self.value.clamp(self.min, self.max);
        self.value
    }
}

/// Every hour covered by `range`, starting at midnight of the first day.
pub fn hourly_timestamps(range: &DateRange) -> Vec<NaiveDateTime> {
    let start = range.start_date.and_time(NaiveTime::default());
    (0..range.hours())
        .map(|h| start + Duration::hours(h as i64))
        .collect()
}

/// Seed derived from the site and window only.
pub fn seed_for(coordinates: &Coordinates, range: &DateRange) -> u64 {
    let mut h = splitmix64(coordinates.latitude.to_bits());
    h = splitmix64(h ^ coordinates.longitude.to_bits().rotate_left(17));
    h = splitmix64(h ^ range.start_date.num_days_from_ce() as u64);
    splitmix64(h ^ (range.end_date.num_days_from_ce() as u64).rotate_left(32))
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Solar declination in radians for a day of the year.
fn declination(day_of_year: u32) -> f64 {
    let n = f64::from(day_of_year);
    23.45_f64.to_radians() * (2.0 * std::f64::consts::PI * (284.0 + n) / 365.0).sin()
}

/// Clear-sky global horizontal irradiance (W/m²) at the middle of `hour`.
pub fn clear_sky_irradiance(latitude: f64, day_of_year: u32, hour: u32) -> f64 {
    let phi = latitude.to_radians();
    let delta = declination(day_of_year);
    let omega = (15.0 * (f64::from(hour) + 0.5 - 12.0)).to_radians();
    let sin_alt = phi.sin() * delta.sin() + phi.cos() * delta.cos() * omega.cos();
    if sin_alt <= 0.0 {
        return 0.0;
    }
    1098.0 * sin_alt * (-0.057 / sin_alt).exp()
}

/// Seasonal phase in `[-1, 1]`: 1 at local midsummer, -1 at midwinter.
fn summer_phase(latitude: f64, day_of_year: u32) -> f64 {
    let peak = if latitude >= 0.0 { 200.0 } else { 17.0 };
    (2.0 * std::f64::consts::PI * (f64::from(day_of_year) - peak) / 365.0).cos()
}

/// Synthesizes an hourly series for the site and window.
pub fn synthesize(coordinates: &Coordinates, range: &DateRange) -> Vec<HourlyResource> {
    let mut rng = StdRng::seed_from_u64(seed_for(coordinates, range));
    let lat = coordinates.latitude;
    let abs_lat = lat.abs();

    let mut cloud = Ar1::new(0.78, 0.92, 0.06, 0.15, 1.0);
    let mut gust = Ar1::new(1.0, 0.9, 0.08, 0.1, 2.5);
    let mut temp_anomaly = Ar1::new(0.0, 0.95, 0.45, -8.0, 8.0);
    let mut flow_noise = Ar1::new(0.0, 0.99, 0.01, -0.15, 0.15);

    let annual_mean_c = 27.0 - 0.006 * lat * lat;
    let seasonal_amp_c = 0.25 * abs_lat;
    let mean_wind = 4.0 + 0.04 * abs_lat;
    let melt_peak = if lat >= 0.0 { 130.0 } else { 310.0 };

    hourly_timestamps(range)
        .into_iter()
        .map(|timestamp| {
            let doy = timestamp.ordinal();
            let hour = timestamp.hour();
            let season = summer_phase(lat, doy);
            let diurnal = (2.0 * std::f64::consts::PI * (f64::from(hour) - 15.0) / 24.0).cos();

            let irradiance = clear_sky_irradiance(lat, doy, hour) * cloud.step(&mut rng);

            let wind = mean_wind * (1.0 - 0.15 * season) * (1.0 + 0.1 * diurnal)
                * gust.step(&mut rng);

            let temperature = annual_mean_c
                + seasonal_amp_c * season
                + 5.0 * diurnal
                + temp_anomaly.step(&mut rng);

            let melt = (2.0 * std::f64::consts::PI * (f64::from(doy) - melt_peak) / 365.0).cos();
            let hydro = (0.5 + 0.3 * melt + flow_noise.step(&mut rng)).clamp(0.0, 1.0);

            HourlyResource {
                timestamp,
                irradiance_w_m2: irradiance.max(0.0),
                wind_speed_m_s: wind.max(0.0),
                hydro_availability: hydro,
                temperature_c: temperature,
            }
        })
        .collect()
}
