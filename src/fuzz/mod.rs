pub mod ffuf;
