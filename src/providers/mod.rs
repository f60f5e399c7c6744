pub mod xnat;
