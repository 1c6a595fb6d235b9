// Input handling shared by the patient-facing front ends
pub mod forms;

pub use forms::{is_valid_phone_number, Form, FormError, LoginForm, RegistrationForm};
