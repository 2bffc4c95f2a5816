pub mod city;
pub mod dates;
pub mod session;
pub mod trip;
pub mod user;
