//! An allow-by-default seccomp filter that turns the identity-changing
//! syscall family into silent successes.
//!
//! Inside a single-uid user namespace, chown and the set*id calls fail
//! with EPERM for any id outside the map, and plenty of software treats
//! that as fatal. Rewriting them to return 0 lets such software carry on;
//! nothing is lost because ownership could not have changed anyway.

use anyhow::{bail, Context, Result};
use libc::{c_ushort, c_void};

const SECCOMP_RET_ALLOW: u32 = 0x7fff_0000;
/// SECCOMP_RET_ERRNO with errno 0 in the data bits: fail the call
/// "successfully".
const SECCOMP_RET_ERRNO_0: u32 = 0x0005_0000;

const BPF_LD: u16 = 0x00;
const BPF_JMP: u16 = 0x05;
const BPF_RET: u16 = 0x06;
const BPF_W: u16 = 0x00;
const BPF_ABS: u16 = 0x20;
const BPF_JEQ: u16 = 0x10;
const BPF_K: u16 = 0x00;

// Offsets into struct seccomp_data.
const SECCOMP_DATA_NR: u32 = 0;
const SECCOMP_DATA_ARCH: u32 = 4;

const AUDIT_ARCH_X86_64: u32 = 0xc000_003e;
const AUDIT_ARCH_I386: u32 = 0x4000_0003;
const AUDIT_ARCH_AARCH64: u32 = 0xc000_00b7;

#[cfg(target_arch = "x86_64")]
const ARCH_NR: u32 = AUDIT_ARCH_X86_64;
#[cfg(target_arch = "x86")]
const ARCH_NR: u32 = AUDIT_ARCH_I386;
#[cfg(target_arch = "aarch64")]
const ARCH_NR: u32 = AUDIT_ARCH_AARCH64;

/// chown and the set*id family as this architecture spells them.
#[cfg(target_arch = "x86_64")]
const IDENTITY_SYSCALLS: &[libc::c_long] = &[
    libc::SYS_chown,
    libc::SYS_fchown,
    libc::SYS_fchownat,
    libc::SYS_lchown,
    libc::SYS_setfsgid,
    libc::SYS_setfsuid,
    libc::SYS_setgid,
    libc::SYS_setgroups,
    libc::SYS_setregid,
    libc::SYS_setresgid,
    libc::SYS_setresuid,
    libc::SYS_setreuid,
    libc::SYS_setuid,
];

/// i386 has both the legacy 16-bit-uid calls and their 32 variants.
#[cfg(target_arch = "x86")]
const IDENTITY_SYSCALLS: &[libc::c_long] = &[
    libc::SYS_chown,
    libc::SYS_chown32,
    libc::SYS_fchown,
    libc::SYS_fchown32,
    libc::SYS_fchownat,
    libc::SYS_lchown,
    libc::SYS_lchown32,
    libc::SYS_setfsgid,
    libc::SYS_setfsgid32,
    libc::SYS_setfsuid,
    libc::SYS_setfsuid32,
    libc::SYS_setgid,
    libc::SYS_setgid32,
    libc::SYS_setgroups,
    libc::SYS_setgroups32,
    libc::SYS_setregid,
    libc::SYS_setregid32,
    libc::SYS_setresgid,
    libc::SYS_setresgid32,
    libc::SYS_setresuid,
    libc::SYS_setresuid32,
    libc::SYS_setreuid,
    libc::SYS_setreuid32,
    libc::SYS_setuid,
    libc::SYS_setuid32,
];

/// aarch64 never had the non-at chown spellings.
#[cfg(target_arch = "aarch64")]
const IDENTITY_SYSCALLS: &[libc::c_long] = &[
    libc::SYS_fchown,
    libc::SYS_fchownat,
    libc::SYS_setfsgid,
    libc::SYS_setfsuid,
    libc::SYS_setgid,
    libc::SYS_setgroups,
    libc::SYS_setregid,
    libc::SYS_setresgid,
    libc::SYS_setresuid,
    libc::SYS_setreuid,
    libc::SYS_setuid,
];

#[repr(C)]
#[allow(non_camel_case_types)]
#[derive(Copy, Clone)]
struct sock_filter {
    code: u16,
    jt: u8,
    jf: u8,
    k: u32,
}

#[repr(C)]
#[allow(non_camel_case_types)]
struct sock_fprog {
    len: c_ushort,
    filter: *const sock_filter,
}

fn bpf_stmt(code: u16, k: u32) -> sock_filter {
    sock_filter {
        code,
        jt: 0,
        jf: 0,
        k,
    }
}

fn bpf_jump(code: u16, k: u32, jt: u8, jf: u8) -> sock_filter {
    sock_filter { code, jt, jf, k }
}

/// Check the audit arch, then compare the syscall number against the
/// table. Matches return errno 0; everything else, including a foreign
/// arch, falls through to the allow.
fn build_filter() -> Vec<sock_filter> {
    let count = IDENTITY_SYSCALLS.len();
    let mut prog = vec![
        bpf_stmt(BPF_LD | BPF_W | BPF_ABS, SECCOMP_DATA_ARCH),
        bpf_jump(BPF_JMP | BPF_JEQ | BPF_K, ARCH_NR, 0, (count + 1) as u8),
        bpf_stmt(BPF_LD | BPF_W | BPF_ABS, SECCOMP_DATA_NR),
    ];
    for (i, nr) in IDENTITY_SYSCALLS.iter().enumerate() {
        // A hit jumps over the remaining compares and the allow.
        prog.push(bpf_jump(
            BPF_JMP | BPF_JEQ | BPF_K,
            *nr as u32,
            (count - i) as u8,
            0,
        ));
    }
    prog.push(bpf_stmt(BPF_RET | BPF_K, SECCOMP_RET_ALLOW));
    prog.push(bpf_stmt(BPF_RET | BPF_K, SECCOMP_RET_ERRNO_0));
    prog
}

/// Installs the filter in this process, ahead of exec. no_new_privs is a
/// precondition for an unprivileged PR_SET_SECCOMP.
pub fn neutralize_identity_changes() -> Result<()> {
    if let Err(errno) = prctl::set_no_new_privileges(true) {
        bail!("could not set no_new_privs: errno {}", errno);
    }

    let filter = build_filter();
    let prog = sock_fprog {
        len: filter.len() as c_ushort,
        filter: filter.as_ptr(),
    };
    let ret = unsafe {
        libc::prctl(
            libc::PR_SET_SECCOMP,
            libc::SECCOMP_MODE_FILTER as libc::c_ulong,
            &prog as *const sock_fprog as *const c_void,
        )
    };
    if ret != 0 {
        return Err(std::io::Error::last_os_error()).context("PR_SET_SECCOMP");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::wait;
    use nix::unistd::{self, Gid, Uid};
    use serial_test::serial;

    #[test]
    fn filter_shape() {
        let filter = build_filter();
        assert_eq!(filter.len(), IDENTITY_SYSCALLS.len() + 5);

        let first = filter.first().unwrap();
        assert_eq!(first.code, BPF_LD | BPF_W | BPF_ABS);
        assert_eq!(first.k, SECCOMP_DATA_ARCH);

        let allow = filter[filter.len() - 2];
        let errno = filter[filter.len() - 1];
        assert_eq!(allow.k, SECCOMP_RET_ALLOW);
        assert_eq!(errno.k, SECCOMP_RET_ERRNO_0);

        // Every compare lands exactly on the errno return.
        for (i, insn) in filter[3..filter.len() - 2].iter().enumerate() {
            let position = 3 + i;
            let target = position + 1 + insn.jt as usize;
            assert_eq!(target, filter.len() - 1);
        }
    }

    // Forked so neither the filter nor no_new_privs sticks to the test
    // runner. The child reports through its exit code.
    fn check_in_child<F: FnOnce() -> bool>(check: F) -> Result<()> {
        match unsafe { unistd::fork()? } {
            unistd::ForkResult::Parent { child } => {
                let status = wait::waitpid(child, None)?;
                match status {
                    wait::WaitStatus::Exited(_, 0) => Ok(()),
                    other => bail!("check failed in the child: {:?}", other),
                }
            }
            unistd::ForkResult::Child => {
                let ok = neutralize_identity_changes().is_ok() && check();
                std::process::exit(if ok { 0 } else { 1 });
            }
        }
    }

    #[test]
    #[serial]
    fn chown_pretends_to_succeed() -> Result<()> {
        let tmp = crate::utils::create_temp_dir("test_chown_pretends_to_succeed")?;
        let path = tmp.join("file");
        std::fs::write(&path, "x")?;
        let owner_before = std::os::linux::fs::MetadataExt::st_uid(&std::fs::metadata(&path)?);

        check_in_child(|| {
            let chowned = unistd::chown(
                &path,
                Some(Uid::from_raw(12345)),
                Some(Gid::from_raw(12345)),
            )
            .is_ok();
            let owner = std::fs::metadata(&path)
                .map(|m| std::os::linux::fs::MetadataExt::st_uid(&m))
                .unwrap_or(u32::MAX);
            chowned && owner == owner_before
        })
    }

    #[test]
    #[serial]
    fn setuid_pretends_to_succeed() -> Result<()> {
        let uid_before = unistd::getuid();
        check_in_child(|| {
            unistd::setuid(Uid::from_raw(12345)).is_ok() && unistd::getuid() == uid_before
        })
    }
}
