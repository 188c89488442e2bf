/// Shared-secret check for room administration.
#[derive(Debug)]
pub struct AdminAuth {
    password: String,
}

impl AdminAuth {
    pub fn new(password: String) -> Self {
        Self { password }
    }

    pub fn verify(&self, supplied: &str) -> bool {
        constant_time_eq::constant_time_eq(self.password.as_bytes(), supplied.as_bytes())
    }
}
