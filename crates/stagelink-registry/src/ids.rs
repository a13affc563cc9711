//! Opaque capability tokens for sessions and devices.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of a session id. Knowledge of the id is the only access control,
/// so it carries enough entropy to be unguessable.
const SESSION_ID_LEN: usize = 10;

/// Device ids only need uniqueness within one session.
const DEVICE_ID_LEN: usize = 8;

pub fn session_id() -> String {
    token(SESSION_ID_LEN)
}

pub fn device_id() -> String {
    token(DEVICE_ID_LEN)
}

fn token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
