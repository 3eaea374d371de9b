pub mod triple_hooks;
