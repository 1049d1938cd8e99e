// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw `sendmsg`/`recvmsg` blob+fd transfer over a connected Unix socket
//! (§1.4.B). Not length-prefixed: the receiver reads until EOF.

use crate::error::{Result, SupervisorError};
use nix::sys::socket::{recvmsg, sendmsg, ControlMessage, ControlMessageOwned, MsgFlags};
use std::io::{IoSlice, IoSliceMut};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;

/// Tolerated blob size per transfer.
pub const MIN_BLOB_CAPACITY: usize = 2 * 1024 * 1024;
/// FD budget accumulated per transfer; only the first received FD is kept.
pub const MIN_FD_BUDGET: usize = 64;

const CHUNK: usize = 64 * 1024;

/// Stream `blob` to `stream`, attaching `fd` as `SCM_RIGHTS` ancillary data
/// on the first `sendmsg` call. Loops until fully drained, including the
/// zero-length case (a send with no state yet, FD only).
pub fn send_blob_and_fd(stream: &UnixStream, blob: &[u8], fd: Option<RawFd>) -> Result<()> {
    let raw = stream.as_raw_fd();
    let fd_arr = fd.map(|f| [f]);
    let mut sent = 0usize;
    let mut first = true;

    loop {
        if !first && sent >= blob.len() {
            break;
        }
        let end = (sent + CHUNK).min(blob.len());
        let iov = [IoSlice::new(&blob[sent..end])];
        let cmsgs: Vec<ControlMessage<'_>> = match (first, &fd_arr) {
            (true, Some(arr)) => vec![ControlMessage::ScmRights(arr)],
            _ => Vec::new(),
        };

        let n = sendmsg::<()>(raw, &iov, &cmsgs, MsgFlags::empty(), None)?;
        if n == 0 && end > sent {
            return Err(SupervisorError::ShortWrite);
        }
        sent += n;
        first = false;

        if blob.is_empty() {
            break;
        }
    }
    Ok(())
}

/// Loop `recvmsg` until EOF, concatenating payload and keeping the first FD
/// seen across any `SCM_RIGHTS` control message; every subsequent FD is
/// closed immediately (§1.4.B "Receive protocol").
pub fn recv_blob_and_fd(stream: &UnixStream) -> Result<(Vec<u8>, Option<RawFd>)> {
    let raw = stream.as_raw_fd();
    let mut blob = Vec::with_capacity(MIN_BLOB_CAPACITY.min(CHUNK * 4));
    let mut kept_fd: Option<RawFd> = None;
    let mut buf = vec![0u8; CHUNK];

    loop {
        let mut iov = [IoSliceMut::new(&mut buf)];
        let mut cmsg_space = nix::cmsg_space!([RawFd; MIN_FD_BUDGET]);
        let msg = recvmsg::<()>(raw, &mut iov, Some(&mut cmsg_space), MsgFlags::empty())?;

        if msg.bytes == 0 {
            break;
        }
        blob.extend_from_slice(&buf[..msg.bytes]);

        for cmsg in msg.cmsgs().map_err(|_| SupervisorError::EmptyTransfer)? {
            if let ControlMessageOwned::ScmRights(fds) = cmsg {
                for raw_fd in fds {
                    if kept_fd.is_none() {
                        kept_fd = Some(raw_fd);
                    } else {
                        let _ = nix::unistd::close(raw_fd);
                    }
                }
            }
        }
    }

    if blob.is_empty() && kept_fd.is_none() {
        return Err(SupervisorError::EmptyTransfer);
    }

    Ok((blob, kept_fd))
}
