pub mod serial_reader;
