pub mod auth;
pub mod bookings;
pub mod reservations;
pub mod stripe;

#[cfg(test)]
pub mod test_support;
