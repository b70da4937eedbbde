//! Service wiring
//!
//! One place that builds every application service over a shared
//! repository provider, clock and slot-lock registry.

use std::sync::Arc;

use super::booking::{AvailabilityService, BookingPolicy, BookingService};
use super::dashboard::DashboardService;
use super::locks::SlotLockRegistry;
use super::owner::OwnerService;
use super::ports::{NotificationSender, QrEncoder};
use super::station::StationService;
use super::user::UserService;
use crate::domain::RepositoryProvider;
use crate::shared::{PresentationZone, SharedClock};

/// Everything a transport layer needs to serve requests
pub struct AppServices {
    pub locks: Arc<SlotLockRegistry>,
    pub bookings: Arc<BookingService>,
    pub availability: Arc<AvailabilityService>,
    pub stations: Arc<StationService>,
    pub owners: Arc<OwnerService>,
    pub users: Arc<UserService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        clock: SharedClock,
        qr: Arc<dyn QrEncoder>,
        notifier: Arc<dyn NotificationSender>,
        policy: BookingPolicy,
        zone: PresentationZone,
    ) -> Self {
        let locks = Arc::new(SlotLockRegistry::new());
        let stations = Arc::new(StationService::new(
            repos.clone(),
            locks.clone(),
            clock.clone(),
            zone,
        ));
        Self {
            bookings: Arc::new(BookingService::new(
                repos.clone(),
                locks.clone(),
                qr,
                clock.clone(),
                policy,
                zone,
            )),
            availability: Arc::new(AvailabilityService::new(
                repos.clone(),
                clock.clone(),
                policy,
                zone,
            )),
            users: Arc::new(UserService::new(repos.clone(), stations.clone(), clock.clone())),
            owners: Arc::new(OwnerService::new(repos.clone(), notifier, clock.clone())),
            dashboard: Arc::new(DashboardService::new(repos, clock, zone)),
            stations,
            locks,
        }
    }
}
