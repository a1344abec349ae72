pub mod delivery_status;
pub mod dtos;
