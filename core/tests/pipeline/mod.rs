mod concurrency;
mod failover;
mod retry;
mod timeout;

use http::Method;
use reqstore_core::Request;

pub const PRIMARY_HOST: &str = "acct.table.core.windows.net";
pub const SECONDARY_HOST: &str = "acct-secondary.table.core.windows.net";

pub fn get() -> Request {
    Request::new(
        Method::GET,
        format!("https://{PRIMARY_HOST}/mytable(PartitionKey='p',RowKey='r')")
            .parse()
            .unwrap(),
    )
}
