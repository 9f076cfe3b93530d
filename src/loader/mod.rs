pub mod file_loader;
