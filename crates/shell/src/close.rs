//! Close negotiation for manager windows.
//!
//! Before a manager window may close, its content is asked whether it
//! holds unsaved data. This module owns that negotiation: single-window
//! close requests, the all-windows dirty check (with backdrop handling
//! on the content side), and the close-all sequence that only closes
//! anything once every window has answered clean.

use opshell_ipc::{ShowBackDropInfo, ShowBackDropReason};
use opshell_platform::WindowId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Delay before a pending `show` backdrop command is pushed to a window
/// that has already answered its dirty check.
const BACKDROP_SHOW_DELAY: Duration = Duration::from_millis(100);

/// How long a configured backdrop disappear delay stays armed. A check
/// whose answers arrive later than this hides the backdrops without the
/// configured delay.
const BACKDROP_DELAY_RESET: Duration = Duration::from_millis(2000);

/// The window-system operations the close controller needs.
///
/// Implemented by the window registry; kept narrow so the controller
/// does not depend on the registry type itself.
pub trait CloseHost: Send + Sync {
    /// Ask the window's content whether it may be closed. The receiver
    /// holds `None` until the content answers.
    fn can_window_be_closed(&self, window: WindowId) -> watch::Receiver<Option<bool>>;
    fn restore_and_focus(&self, window: WindowId);
    fn show_backdrop(&self, window: WindowId, info: ShowBackDropInfo);
    fn close_window(&self, window: WindowId);
    fn additional_windows(&self) -> Vec<WindowId>;
    fn main_window(&self) -> Option<WindowId>;
}

struct SingleRequest {
    answer: watch::Receiver<Option<bool>>,
    hijacked: bool,
}

#[derive(Default)]
struct CloseState {
    /// Dirty state per window: `None` while the answer is pending,
    /// `Some(true)` when the content reported unsaved data.
    dirty_state: HashMap<WindowId, Option<bool>>,
    close_all_invoked: bool,
    dirty_check_invoked: bool,
    do_close_main: bool,
    can_main_be_closed: bool,
    single_requests: HashMap<WindowId, SingleRequest>,
    backdrop_commands: HashMap<WindowId, ShowBackDropInfo>,
    backdrop_disappear_delay: Duration,
}

struct Inner {
    host: Arc<dyn CloseHost>,
    state: Mutex<CloseState>,
}

/// Coordinates close requests across all manager windows.
#[derive(Clone)]
pub struct CloseController {
    inner: Arc<Inner>,
}

impl CloseController {
    pub fn new(host: Arc<dyn CloseHost>) -> Self {
        Self {
            inner: Arc::new(Inner {
                host,
                state: Mutex::new(CloseState::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CloseState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -----------------------------------------------------------------
    // State queries
    // -----------------------------------------------------------------

    pub fn do_close_main(&self) -> bool {
        self.lock().do_close_main
    }

    pub fn set_do_close_main(&self, value: bool) {
        self.lock().do_close_main = value;
    }

    pub fn close_all_windows_invoked(&self) -> bool {
        self.lock().close_all_invoked
    }

    pub fn dirty_check_windows_invoked(&self) -> bool {
        self.lock().dirty_check_invoked
    }

    /// True while any close request is in flight, all-windows or single.
    pub fn close_any_window_invoked(&self) -> bool {
        let state = self.lock();
        state.close_all_invoked || !state.single_requests.is_empty()
    }

    pub fn is_window_dirty(&self, window: WindowId) -> Option<bool> {
        self.lock().dirty_state.get(&window).copied().flatten()
    }

    pub fn is_window_dirty_check_started(&self, window: WindowId) -> bool {
        self.lock().dirty_state.contains_key(&window)
    }

    pub fn is_window_dirty_check_pending(&self, window: WindowId) -> bool {
        matches!(self.lock().dirty_state.get(&window), Some(None))
    }

    pub fn is_window_dirty_check_done(&self, window: WindowId) -> bool {
        matches!(self.lock().dirty_state.get(&window), Some(Some(_)))
    }

    /// The main window may only close once the all-windows check passed
    /// and closing the main was requested.
    pub fn can_main_window_be_closed(&self) -> bool {
        let state = self.lock();
        state.can_main_be_closed && state.do_close_main
    }

    pub fn clear_dirty_state(&self) {
        self.lock().dirty_state.clear();
    }

    // -----------------------------------------------------------------
    // Single window close
    // -----------------------------------------------------------------

    /// Asks one window's content for permission and closes the window on
    /// a clean answer. Returns whether the window was closed.
    ///
    /// Refused while a close-all is running or a request for this window
    /// is already pending. A pending request here may be hijacked by a
    /// later close-all; in that case the close-all owns the answer and
    /// this call returns false without closing.
    pub async fn close_window(&self, window: WindowId) -> bool {
        let answer = {
            let mut state = self.lock();
            if state.close_all_invoked {
                return false;
            }
            if state.single_requests.contains_key(&window) {
                return false;
            }
            let answer = self.inner.host.can_window_be_closed(window);
            state.single_requests.insert(
                window,
                SingleRequest {
                    answer: answer.clone(),
                    hijacked: false,
                },
            );
            answer
        };

        let result = wait_for_answer(answer).await;

        let hijacked = {
            let mut state = self.lock();
            let hijacked = state
                .single_requests
                .get(&window)
                .map(|r| r.hijacked)
                .unwrap_or(false);
            if !hijacked {
                state.dirty_state.insert(window, Some(!result));
            }
            hijacked
        };

        if hijacked {
            // A close-all took over the request and handles the answer.
            debug!(window, "single close request was hijacked");
            self.lock().single_requests.remove(&window);
            return false;
        }

        if result {
            self.inner.host.close_window(window);
        }
        let mut state = self.lock();
        state.dirty_state.remove(&window);
        state.single_requests.remove(&window);
        result
    }

    // -----------------------------------------------------------------
    // Dirty check over a set of windows
    // -----------------------------------------------------------------

    /// Checks the given windows without closing any of them. Returns
    /// true when none reported unsaved data.
    ///
    /// Windows that have answered are covered by a backdrop until the
    /// whole check completes. Does not touch the per-window dirty state.
    pub async fn check_windows(&self, window_ids: &[WindowId]) -> bool {
        if self.close_any_window_invoked() {
            return false;
        }
        if window_ids.is_empty() {
            return true;
        }
        self.lock().dirty_check_invoked = true;

        let mut answers = Vec::with_capacity(window_ids.len());
        for &window in window_ids {
            answers.push((window, self.inner.host.can_window_be_closed(window)));
            self.inner.host.restore_and_focus(window);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        for (window, answer) in answers {
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = wait_for_answer(answer).await;
                let _ = tx.send((window, result));
            });
        }
        drop(tx);

        let mut can_do_close = true;
        let mut arrived = 0usize;
        while let Some((window, result)) = rx.recv().await {
            if !result {
                can_do_close = false;
            }
            arrived += 1;
            if arrived == window_ids.len() {
                for &id in window_ids {
                    self.inner.host.show_backdrop(
                        id,
                        ShowBackDropInfo {
                            show: false,
                            reason: ShowBackDropReason::Close,
                        },
                    );
                }
                break;
            }
            // Answered windows stay disabled until everyone replied.
            self.inner.host.show_backdrop(
                window,
                ShowBackDropInfo {
                    show: true,
                    reason: ShowBackDropReason::Close,
                },
            );
        }
        self.lock().dirty_check_invoked = false;
        can_do_close
    }

    /// Runs the dirty check over every manager window: all additional
    /// windows plus the main window. Returns true when every window
    /// answered clean.
    ///
    /// Pending single close requests for additional windows are
    /// hijacked instead of asking the content twice. With
    /// `skip_dirty_check` the contents are not asked at all and every
    /// window counts as clean.
    pub async fn check_all_windows(
        &self,
        reason: ShowBackDropReason,
        skip_dirty_check: bool,
        backdrop_disappear_delay: Duration,
    ) -> bool {
        let additional = self.inner.host.additional_windows();
        let main = self.inner.host.main_window();

        // (window, answer); a `None` answer counts as an immediate yes.
        let mut targets: Vec<(WindowId, Option<watch::Receiver<Option<bool>>>)> = Vec::new();
        {
            let mut state = self.lock();
            if state.dirty_check_invoked {
                return false;
            }
            state.dirty_state.clear();
            state.dirty_check_invoked = true;
            state.backdrop_commands.clear();
            state.backdrop_disappear_delay = backdrop_disappear_delay;

            for &window in &additional {
                if skip_dirty_check {
                    targets.push((window, None));
                } else if let Some(request) = state.single_requests.get_mut(&window) {
                    // A single close is already waiting on this window;
                    // take over its answer instead of asking again.
                    request.hijacked = true;
                    targets.push((window, Some(request.answer.clone())));
                } else {
                    targets.push((window, Some(self.inner.host.can_window_be_closed(window))));
                }
            }
            if let Some(main) = main {
                if skip_dirty_check {
                    targets.push((main, None));
                } else {
                    targets.push((main, Some(self.inner.host.can_window_be_closed(main))));
                }
            }
            for (window, _) in &targets {
                state.dirty_state.insert(*window, None);
            }
        }

        let window_ids: Vec<WindowId> = targets.iter().map(|(w, _)| *w).collect();
        for &window in &window_ids {
            self.inner.host.restore_and_focus(window);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        for (window, answer) in targets {
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = match answer {
                    Some(answer) => wait_for_answer(answer).await,
                    None => true,
                };
                let _ = tx.send((window, result));
            });
        }
        drop(tx);

        // The configured disappear delay only stays armed for a bounded
        // time; late answers hide the backdrops without it.
        {
            let controller = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(BACKDROP_DELAY_RESET).await;
                controller.lock().backdrop_disappear_delay = Duration::ZERO;
            });
        }

        let total = window_ids.len();
        let mut can_do_close = true;
        let mut arrived = 0usize;
        while let Some((window, result)) = rx.recv().await {
            {
                let mut state = self.lock();
                state.dirty_state.insert(window, Some(!result));
                state.backdrop_commands.insert(
                    window,
                    ShowBackDropInfo {
                        show: true,
                        reason,
                    },
                );
            }
            if !result {
                can_do_close = false;
            }

            // Disable the answered window shortly after its reply so the
            // user cannot keep editing while the check is transient.
            {
                let controller = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(BACKDROP_SHOW_DELAY).await;
                    controller.invoke_show_backdrop(window);
                });
            }

            arrived += 1;
            if arrived == total {
                let delay = self.lock().backdrop_disappear_delay;
                let controller = self.clone();
                let window_ids = window_ids.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(main) = controller.inner.host.main_window() {
                        controller.lock().backdrop_commands.insert(
                            main,
                            ShowBackDropInfo {
                                show: false,
                                reason,
                            },
                        );
                        controller.invoke_show_backdrop(main);
                    }
                    for window in window_ids {
                        controller.lock().backdrop_commands.insert(
                            window,
                            ShowBackDropInfo {
                                show: false,
                                reason,
                            },
                        );
                        controller.invoke_show_backdrop(window);
                    }
                });
                break;
            }
        }

        self.lock().dirty_check_invoked = false;
        can_do_close
    }

    // -----------------------------------------------------------------
    // Close all
    // -----------------------------------------------------------------

    /// Checks every window and, only when all answered clean, closes the
    /// additional windows followed by the main window when requested.
    /// A single dirty window keeps every window open.
    pub async fn close_all_windows(&self, do_close_main: bool, skip_dirty_check: bool) -> bool {
        {
            let mut state = self.lock();
            if state.close_all_invoked {
                return false;
            }
            state.close_all_invoked = true;
            state.can_main_be_closed = false;
            state.do_close_main = do_close_main;
        }

        let reason = if do_close_main {
            ShowBackDropReason::Close
        } else {
            ShowBackDropReason::Logoff
        };
        let not_dirty = self
            .check_all_windows(reason, skip_dirty_check, Duration::ZERO)
            .await;

        if not_dirty {
            self.lock().can_main_be_closed = true;
            for window in self.inner.host.additional_windows() {
                self.inner.host.close_window(window);
            }
            if do_close_main {
                if let Some(main) = self.inner.host.main_window() {
                    self.inner.host.close_window(main);
                }
            }
        }

        let mut state = self.lock();
        state.dirty_state.clear();
        state.close_all_invoked = false;
        not_dirty
    }

    fn invoke_show_backdrop(&self, window: WindowId) {
        let command = self.lock().backdrop_commands.remove(&window);
        if let Some(info) = command {
            self.inner.host.show_backdrop(window, info);
        }
    }
}

/// Waits until the content answered. A dropped sender counts as a
/// refused close.
async fn wait_for_answer(mut answer: watch::Receiver<Option<bool>>) -> bool {
    loop {
        if let Some(result) = *answer.borrow_and_update() {
            return result;
        }
        if answer.changed().await.is_err() {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct HostState {
        main: Option<WindowId>,
        additional: Vec<WindowId>,
        answers: HashMap<WindowId, watch::Sender<Option<bool>>>,
        closed: Vec<WindowId>,
        focused: Vec<WindowId>,
        backdrops: Vec<(WindowId, ShowBackDropInfo)>,
    }

    #[derive(Default)]
    struct MockHost {
        state: StdMutex<HostState>,
    }

    impl MockHost {
        fn with_windows(main: WindowId, additional: Vec<WindowId>) -> Arc<Self> {
            let host = Self::default();
            {
                let mut state = host.state.lock().unwrap();
                state.main = Some(main);
                state.additional = additional;
            }
            Arc::new(host)
        }

        fn additional_only(additional: Vec<WindowId>) -> Arc<Self> {
            let host = Self::default();
            host.state.lock().unwrap().additional = additional;
            Arc::new(host)
        }

        fn answer(&self, window: WindowId, result: bool) {
            let sender = self.state.lock().unwrap().answers.remove(&window);
            if let Some(sender) = sender {
                let _ = sender.send(Some(result));
            }
        }

        fn has_pending_question(&self, window: WindowId) -> bool {
            self.state.lock().unwrap().answers.contains_key(&window)
        }

        fn closed(&self) -> Vec<WindowId> {
            self.state.lock().unwrap().closed.clone()
        }

        fn backdrops(&self) -> Vec<(WindowId, ShowBackDropInfo)> {
            self.state.lock().unwrap().backdrops.clone()
        }
    }

    impl CloseHost for MockHost {
        fn can_window_be_closed(&self, window: WindowId) -> watch::Receiver<Option<bool>> {
            let (tx, rx) = watch::channel(None);
            self.state.lock().unwrap().answers.insert(window, tx);
            rx
        }

        fn restore_and_focus(&self, window: WindowId) {
            self.state.lock().unwrap().focused.push(window);
        }

        fn show_backdrop(&self, window: WindowId, info: ShowBackDropInfo) {
            self.state.lock().unwrap().backdrops.push((window, info));
        }

        fn close_window(&self, window: WindowId) {
            self.state.lock().unwrap().closed.push(window);
        }

        fn additional_windows(&self) -> Vec<WindowId> {
            self.state.lock().unwrap().additional.clone()
        }

        fn main_window(&self) -> Option<WindowId> {
            self.state.lock().unwrap().main
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn single_close_clean_answer_closes_window() {
        let host = MockHost::with_windows(1, vec![2]);
        let controller = CloseController::new(host.clone());

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.close_window(2).await }
        });
        settle().await;
        assert!(controller.close_any_window_invoked());
        host.answer(2, true);

        assert!(task.await.unwrap());
        assert_eq!(host.closed(), vec![2]);
        assert!(!controller.close_any_window_invoked());
    }

    #[tokio::test(start_paused = true)]
    async fn single_close_dirty_answer_keeps_window() {
        let host = MockHost::with_windows(1, vec![2]);
        let controller = CloseController::new(host.clone());

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.close_window(2).await }
        });
        settle().await;
        host.answer(2, false);

        assert!(!task.await.unwrap());
        assert!(host.closed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn second_single_close_for_same_window_is_refused() {
        let host = MockHost::with_windows(1, vec![2]);
        let controller = CloseController::new(host.clone());

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.close_window(2).await }
        });
        settle().await;
        assert!(!controller.close_window(2).await);

        host.answer(2, true);
        assert!(task.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn close_all_clean_closes_additional_then_main() {
        let host = MockHost::with_windows(1, vec![2, 3]);
        let controller = CloseController::new(host.clone());

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.close_all_windows(true, false).await }
        });
        settle().await;
        host.answer(2, true);
        host.answer(3, true);
        host.answer(1, true);

        assert!(task.await.unwrap());
        assert_eq!(host.closed(), vec![2, 3, 1]);
        assert!(controller.can_main_window_be_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn one_dirty_window_keeps_every_window_open() {
        let host = MockHost::with_windows(1, vec![2, 3]);
        let controller = CloseController::new(host.clone());

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.close_all_windows(true, false).await }
        });
        settle().await;
        host.answer(2, true);
        host.answer(3, false);
        host.answer(1, true);

        assert!(!task.await.unwrap());
        assert!(host.closed().is_empty());
        assert!(!controller.can_main_window_be_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn skip_dirty_check_closes_without_asking() {
        let host = MockHost::with_windows(1, vec![2]);
        let controller = CloseController::new(host.clone());

        assert!(controller.close_all_windows(true, true).await);
        settle().await;
        assert_eq!(host.closed(), vec![2, 1]);
        assert!(!host.has_pending_question(1));
        assert!(!host.has_pending_question(2));
    }

    #[tokio::test(start_paused = true)]
    async fn close_all_hijacks_pending_single_request() {
        let host = MockHost::with_windows(1, vec![2]);
        let controller = CloseController::new(host.clone());

        let single = tokio::spawn({
            let controller = controller.clone();
            async move { controller.close_window(2).await }
        });
        settle().await;

        let all = tokio::spawn({
            let controller = controller.clone();
            async move { controller.close_all_windows(false, false).await }
        });
        settle().await;

        // Only one question was asked for window 2.
        host.answer(2, true);
        host.answer(1, true);

        assert!(all.await.unwrap());
        // The hijacked single request reports failure and does not close.
        assert!(!single.await.unwrap());
        // The close-all closed window 2 exactly once.
        assert_eq!(host.closed(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn second_dirty_check_is_refused_while_running() {
        let host = MockHost::with_windows(1, vec![2]);
        let controller = CloseController::new(host.clone());

        let task = tokio::spawn({
            let controller = controller.clone();
            async move {
                controller
                    .check_all_windows(ShowBackDropReason::ApplyDefault, false, Duration::ZERO)
                    .await
            }
        });
        settle().await;
        assert!(
            !controller
                .check_all_windows(ShowBackDropReason::ApplyDefault, false, Duration::ZERO)
                .await
        );

        host.answer(2, true);
        host.answer(1, true);
        assert!(task.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn dirty_state_reflects_answers_during_check() {
        let host = MockHost::with_windows(1, vec![2]);
        let controller = CloseController::new(host.clone());

        let task = tokio::spawn({
            let controller = controller.clone();
            async move {
                controller
                    .check_all_windows(ShowBackDropReason::Logoff, false, Duration::ZERO)
                    .await
            }
        });
        settle().await;
        assert!(controller.is_window_dirty_check_pending(2));

        host.answer(2, false);
        settle().await;
        assert!(controller.is_window_dirty_check_done(2));
        assert_eq!(controller.is_window_dirty(2), Some(true));

        host.answer(1, true);
        assert!(!task.await.unwrap());
        assert_eq!(controller.is_window_dirty(1), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn late_answers_lose_the_backdrop_disappear_delay() {
        let host = MockHost::with_windows(1, vec![2]);
        let controller = CloseController::new(host.clone());

        let task = tokio::spawn({
            let controller = controller.clone();
            async move {
                controller
                    .check_all_windows(
                        ShowBackDropReason::ApplyDefault,
                        false,
                        Duration::from_millis(5000),
                    )
                    .await
            }
        });
        // Answers arrive after the delay has been disarmed.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        host.answer(2, true);
        host.answer(1, true);
        assert!(task.await.unwrap());

        // The hide commands go out right away instead of after 5s.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let hides: Vec<_> = host
            .backdrops()
            .iter()
            .filter(|(_, info)| !info.show)
            .cloned()
            .collect();
        assert!(!hides.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_answers_keep_the_backdrop_disappear_delay() {
        let host = MockHost::with_windows(1, vec![2]);
        let controller = CloseController::new(host.clone());

        let task = tokio::spawn({
            let controller = controller.clone();
            async move {
                controller
                    .check_all_windows(
                        ShowBackDropReason::ApplyDefault,
                        false,
                        Duration::from_millis(1000),
                    )
                    .await
            }
        });
        settle().await;
        host.answer(2, true);
        host.answer(1, true);
        assert!(task.await.unwrap());

        // Shortly after completion the backdrops are still up.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(host.backdrops().iter().all(|(_, info)| info.show));

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(host.backdrops().iter().any(|(_, info)| !info.show));
    }

    #[tokio::test(start_paused = true)]
    async fn backdrops_hide_even_without_a_main_window() {
        let host = MockHost::additional_only(vec![2, 3]);
        let controller = CloseController::new(host.clone());

        let task = tokio::spawn({
            let controller = controller.clone();
            async move {
                controller
                    .check_all_windows(ShowBackDropReason::Logoff, false, Duration::ZERO)
                    .await
            }
        });
        settle().await;
        host.answer(2, true);
        host.answer(3, true);
        assert!(task.await.unwrap());

        tokio::time::sleep(BACKDROP_SHOW_DELAY).await;
        settle().await;
        let hidden: Vec<WindowId> = host
            .backdrops()
            .iter()
            .filter(|(_, info)| !info.show)
            .map(|(window, _)| *window)
            .collect();
        assert!(hidden.contains(&2));
        assert!(hidden.contains(&3));
    }

    #[tokio::test(start_paused = true)]
    async fn check_windows_subset_reports_dirty() {
        let host = MockHost::with_windows(1, vec![2, 3]);
        let controller = CloseController::new(host.clone());

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.check_windows(&[2, 3]).await }
        });
        settle().await;
        host.answer(2, true);
        host.answer(3, false);

        assert!(!task.await.unwrap());
        assert!(host.closed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn check_windows_refused_while_single_close_pending() {
        let host = MockHost::with_windows(1, vec![2]);
        let controller = CloseController::new(host.clone());

        let single = tokio::spawn({
            let controller = controller.clone();
            async move { controller.close_window(2).await }
        });
        settle().await;
        assert!(!controller.check_windows(&[2]).await);

        host.answer(2, true);
        assert!(single.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn check_windows_empty_list_is_clean() {
        let host = MockHost::with_windows(1, vec![]);
        let controller = CloseController::new(host);
        assert!(controller.check_windows(&[]).await);
    }
}
