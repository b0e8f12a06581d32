pub mod deck_logging;
