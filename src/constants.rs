pub mod storage_keys {

    pub const AUTH_SETTINGS: &str = "authSettings";

    pub const SESSION: &str = "folio-session";

    pub const REMEMBER_CREDENTIALS: &str = "remember-credentials";
}

pub mod paths {

    pub const ADMIN: &str = "/admin";

    pub const AUTH_CALLBACK: &str = "/auth/callback";
}

pub mod limits {

    pub const AUTH_EVENT_BUFFER: usize = 64;

    pub const API_KEY_BYTES: usize = 32;
}
