pub mod currencycom;
