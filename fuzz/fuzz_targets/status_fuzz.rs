#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use nfsc::{MountStat, NfsStat, RpcStatus};

#[derive(Arbitrary, Debug)]
struct Codes {
    rpc: u32,
    mount: u32,
    nfs: u32,
}

fuzz_target!(|codes: Codes| {
    match RpcStatus::try_from(codes.rpc) {
        Ok(status) => assert_eq!(status.code(), codes.rpc),
        Err(code) => assert_eq!(code, codes.rpc),
    }
    match MountStat::try_from(codes.mount) {
        Ok(status) => assert!(status.to_string().starts_with(status.name())),
        Err(code) => assert_eq!(code, codes.mount),
    }
    if let Ok(status) = NfsStat::try_from(codes.nfs) {
        assert_eq!(NfsStat::try_from(status.code()), Ok(status));
        assert!(status.name().starts_with("NFS3ERR_"));
    }
});
