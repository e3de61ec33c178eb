/// Return this error from a virtual client's behaviour to take that client out of the run.
///
/// Use it for conditions that are fatal to one client but not to the scenario, for example a
/// backend that keeps refusing connections for this client. The other virtual clients keep
/// running.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ClientBailError {
    msg: String,
}

impl Default for ClientBailError {
    fn default() -> Self {
        Self {
            msg: "Virtual client is bailing".to_string(),
        }
    }
}
