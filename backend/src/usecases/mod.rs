pub mod payment_gateway;
pub mod payment_reconciliation;
pub mod payments;

#[cfg(test)]
pub(crate) mod test_support;
