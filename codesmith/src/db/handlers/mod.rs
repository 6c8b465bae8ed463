pub mod admin_logs;
pub mod credits;
pub mod generations;
pub mod payment_methods;
pub mod payments;
pub mod repository;
pub mod settings;
pub mod users;

pub use admin_logs::AdminLogs;
pub use credits::Credits;
pub use generations::Generations;
pub use payment_methods::{PaymentMethodFilter, PaymentMethods};
pub use payments::Payments;
pub use repository::Repository;
pub use settings::Settings;
pub use users::Users;
