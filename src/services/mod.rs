// Nimbus services
// Services own side effects: the persister serializes all store writes.

pub mod persister;
