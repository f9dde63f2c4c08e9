mod session_setup;

pub type SMBSessionSetupAndXRequest = session_setup::SMBSessionSetupAndXRequest;
pub type SMBSessionSetupAndXResponse = session_setup::SMBSessionSetupAndXResponse;
