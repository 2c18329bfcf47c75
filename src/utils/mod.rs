use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
pub use tokio::time::Instant;

mod datetime;
mod serde;
mod units;

pub use self::serde::*;
pub use datetime::*;
pub use units::*;

pub fn rng_seed_now() -> StdRng {
    use std::time::SystemTime;
    StdRng::seed_from_u64(
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64) // max 584 years
            .unwrap_or_default(),
    )
}

// Sleeps a random fraction of `timeout`, so that pollers started together drift apart.
pub async fn sleep(timeout: Duration, rng: Option<&mut StdRng>) {
    let rand = rng.map_or_else(|| rng_seed_now().gen::<f64>(), |rng| rng.gen::<f64>());
    tokio::time::sleep(timeout.mul_f64(rand)).await;
}
