pub mod crtsh;
pub mod dnsresolve;
pub mod subenum;
