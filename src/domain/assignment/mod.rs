pub mod controller_assignment;
pub mod hypervisor_assignment;
