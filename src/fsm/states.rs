//! State handler functions and table builders for both controllers.
//!
//! ```text
//!  Advertising:
//!
//!  UNINIT ──init──▶ IDLE ──start ok──▶ ADVERTISING ──scan rsp on──▶ ADVERTISING_SCAN_RESPONSE
//!    ▲               ▲ ▲                  │   ▲                          │
//!    │               │ └────stop ok───────┘   └──────scan rsp off────────┘
//!    │               └─────────────────stop ok / external stop──────────┘
//!    └──────────────── uninit (from any state) ────────────────────────────
//!
//!  Scanning:
//!
//!  UNINIT ──init──▶ IDLE ◀──stop ok──▶ SCANNING
//!    ▲                │                   │
//!    └──── uninit ────┴───────────────────┘
//! ```

use log::info;

use super::StateDescriptor;
use super::context::{AdvContext, ScanContext};
use crate::controller::advertising::AdvState;
use crate::controller::scanning::ScanState;

// ═══════════════════════════════════════════════════════════════════════════
//  Advertising table
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_advertising_table() -> [StateDescriptor<AdvState, AdvContext>; 4] {
    [
        // Index 0: Uninit
        StateDescriptor {
            id: AdvState::Uninit,
            name: "Uninit",
            on_enter: Some(adv_uninit_enter),
            on_exit: None,
            next: &[AdvState::Idle],
        },
        // Index 1: Idle
        StateDescriptor {
            id: AdvState::Idle,
            name: "Idle",
            on_enter: Some(adv_idle_enter),
            on_exit: None,
            next: &[AdvState::Advertising, AdvState::Uninit],
        },
        // Index 2: Advertising
        StateDescriptor {
            id: AdvState::Advertising,
            name: "Advertising",
            on_enter: Some(advertising_enter),
            on_exit: None,
            next: &[AdvState::Idle, AdvState::AdvertisingScanResponse, AdvState::Uninit],
        },
        // Index 3: AdvertisingScanResponse
        StateDescriptor {
            id: AdvState::AdvertisingScanResponse,
            name: "AdvertisingScanResponse",
            on_enter: Some(scan_response_enter),
            on_exit: None,
            next: &[AdvState::Advertising, AdvState::Idle, AdvState::Uninit],
        },
    ]
}

fn adv_uninit_enter(ctx: &mut AdvContext) {
    *ctx = AdvContext::default();
}

fn adv_idle_enter(ctx: &mut AdvContext) {
    ctx.on_air = false;
}

fn advertising_enter(ctx: &mut AdvContext) {
    if !ctx.on_air {
        ctx.on_air = true;
        ctx.sessions = ctx.sessions.wrapping_add(1);
        info!("advertising session {} started", ctx.sessions);
    }
}

fn scan_response_enter(_ctx: &mut AdvContext) {
    info!("scan response active");
}

// ═══════════════════════════════════════════════════════════════════════════
//  Scanning table
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_scanning_table() -> [StateDescriptor<ScanState, ScanContext>; 3] {
    [
        // Index 0: Uninit
        StateDescriptor {
            id: ScanState::Uninit,
            name: "Uninit",
            on_enter: Some(scan_uninit_enter),
            on_exit: None,
            next: &[ScanState::Idle],
        },
        // Index 1: Idle
        StateDescriptor {
            id: ScanState::Idle,
            name: "Idle",
            on_enter: Some(scan_idle_enter),
            on_exit: None,
            next: &[ScanState::Scanning, ScanState::Uninit],
        },
        // Index 2: Scanning
        StateDescriptor {
            id: ScanState::Scanning,
            name: "Scanning",
            on_enter: Some(scanning_enter),
            on_exit: Some(scanning_exit),
            next: &[ScanState::Idle, ScanState::Uninit],
        },
    ]
}

fn scan_uninit_enter(ctx: &mut ScanContext) {
    *ctx = ScanContext::default();
}

fn scan_idle_enter(ctx: &mut ScanContext) {
    ctx.callback = None;
}

fn scanning_enter(ctx: &mut ScanContext) {
    ctx.sessions = ctx.sessions.wrapping_add(1);
    info!("scan session {} started", ctx.sessions);
}

fn scanning_exit(_ctx: &mut ScanContext) {
    info!("scan stopped");
}
