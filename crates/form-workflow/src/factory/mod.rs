pub mod form_factory;

pub use form_factory::FormFactory;
