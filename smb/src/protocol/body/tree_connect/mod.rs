mod tree_connect;

pub type SMBTreeConnectAndXRequest = tree_connect::SMBTreeConnectAndXRequest;
pub type SMBTreeConnectAndXResponse = tree_connect::SMBTreeConnectAndXResponse;
