pub mod reservation;
pub mod settlement;
pub mod smtp_mailer;
pub mod stripe;
