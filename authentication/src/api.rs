pub mod authenticator_responses;
pub mod supporting_data_structures;
